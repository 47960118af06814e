//! Vendor network interchange XML.
//!
//! [`XmlEncoder`] renders a block descriptor through an explicit
//! [`TemplateSet`]; [`parse_interface`] reads the interface of an exported
//! block back into model sections.

pub mod encode;
pub mod error;
pub mod interface;
pub mod template;

pub use encode::{Document, XmlEncoder};
pub use error::{Result, XmlError};
pub use interface::{document_block_name, parse_interface, replace_attribute};
pub use template::TemplateSet;
