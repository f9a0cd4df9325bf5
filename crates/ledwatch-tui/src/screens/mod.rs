pub mod console;
pub mod device_form;
