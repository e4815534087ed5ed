pub mod extraction;
pub mod invoice;
pub mod risk;

pub use extraction::{
    AnalyzeRequest, AnalyzeResponse, DetectedDocumentType, DocumentFeature, DocumentField,
    DocumentPage, ExtractionResult, FieldLabel, FieldValue, InlineDocument,
};
pub use invoice::{ConfidenceScores, Invoice, InvoiceItem, InvoiceUpdate, InvoiceWithItems};
pub use risk::RiskReport;
