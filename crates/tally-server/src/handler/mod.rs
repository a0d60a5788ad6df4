pub mod room_http;
pub mod room_socket;
