pub mod ticket;
pub mod work_item;
