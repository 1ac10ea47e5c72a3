pub mod connection;

pub use connection::connect_to_assessment_page;
