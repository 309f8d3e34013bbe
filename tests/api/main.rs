mod fanout;
mod health_check;
mod helpers;
mod lead;
mod purchase;
mod stats;
