mod broadcast;
mod config;
mod engine;
mod expr;
