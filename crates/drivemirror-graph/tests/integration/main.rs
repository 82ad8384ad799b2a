//! Integration tests for the Graph adapter, driven against a mock server

mod test_account;
mod test_copy_polling;
mod test_device_auth;
mod test_permissions;
mod test_tree_operations;
