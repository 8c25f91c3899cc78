pub mod db_utils;
pub mod rut;
pub mod rut_cache;
pub mod rut_filter;
