pub mod test_connection_lifecycle;
pub mod test_relay_over_socket;
