mod chain;
mod controls;
mod details;
mod panels;
