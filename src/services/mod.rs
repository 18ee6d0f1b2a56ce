// Document numbering
pub mod codes;
pub mod sequence;

// Master data
pub mod catalog;

// Sales documents
pub mod delivery_notes;
pub mod orders;
pub mod quotes;

// Stock and sales records
pub mod inventory;

// Quote and order conversions
pub mod conversions;
