mod cluster_tests;
mod crawl_tests;
