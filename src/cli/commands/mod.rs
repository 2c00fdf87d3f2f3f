mod user;

pub use user::{
    cmd_user_create, cmd_user_deactivate, cmd_user_list, cmd_user_reset_password, cmd_user_tree,
};
