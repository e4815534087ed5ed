pub mod erpnext;
pub mod parser;
pub mod risk;

pub use erpnext::ErpNextClient;
pub use parser::DocumentExtractor;
