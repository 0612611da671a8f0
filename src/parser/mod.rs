pub mod filter_ast;
pub mod filter_parser;
pub mod lexer;
pub mod patch_parser;
pub mod resource_type;

pub use filter_ast::{AttrPath, CompareOp, FilterNode};
pub use resource_type::ResourceType;
