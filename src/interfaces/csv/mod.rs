pub mod package_reader;
