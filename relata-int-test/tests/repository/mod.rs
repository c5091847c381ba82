mod find_test;
mod merge_test;
