mod config;
mod decoder;
mod listener;
