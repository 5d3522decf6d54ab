mod client;

pub use client::{DashboardClient, image_file_name};
