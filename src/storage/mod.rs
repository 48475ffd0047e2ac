pub mod offset_file;
