#![cfg(not(windows))]

mod server;

mod raw;

mod client;

mod transactions;

mod globals;

mod derive;
