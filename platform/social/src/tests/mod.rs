mod pg;
mod review;
mod user;
