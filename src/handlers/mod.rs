pub mod db_manager;
pub mod upload;
