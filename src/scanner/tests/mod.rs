mod example_tests;
