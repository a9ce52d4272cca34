mod branches;
mod deliveries;
mod invalid_json;
mod invalid_path;
