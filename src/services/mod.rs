pub mod return_service;
pub mod staff;
pub mod storage;
