pub mod report_writer;
pub mod unpaid_reader;
