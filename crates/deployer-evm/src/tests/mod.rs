
mod contract_tests;
mod integration;
