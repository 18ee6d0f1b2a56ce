pub mod client;
pub mod counter;
pub mod delivery_note;
pub mod delivery_note_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod quote;
pub mod quote_item;
pub mod sale;
