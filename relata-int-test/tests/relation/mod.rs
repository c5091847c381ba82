mod find_related_test;
mod is_related_test;
mod relate_test;
