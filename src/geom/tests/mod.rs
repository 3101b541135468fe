mod test_brep_basic;
mod test_surface_basic;
mod test_trim_basic;
