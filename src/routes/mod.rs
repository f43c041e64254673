//! Route modules for the citation server

pub mod cite;
