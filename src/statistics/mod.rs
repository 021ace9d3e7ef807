/// Special functions and descriptive statistics
pub mod functions;
/// Normal distribution fitted over all databases
pub mod gaussian_test;
/// Multiple testing correction
pub mod multiple_testing;
/// Combination of p-values per database
pub mod p_value_combination;
/// Results and their writers
pub mod statistical_result;
/// Serializable test roster
pub mod test_configuration;
/// Runs the test battery
pub mod test_runner;
