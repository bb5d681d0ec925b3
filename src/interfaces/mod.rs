//! Inbound and outbound data interfaces (operator CSV formats).

pub mod csv;
