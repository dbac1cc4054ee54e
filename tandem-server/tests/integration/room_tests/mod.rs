pub mod test_admission_rejections;
pub mod test_relay_routing;
