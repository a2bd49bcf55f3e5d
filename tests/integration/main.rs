//! Integration test root.


mod end_to_end;
