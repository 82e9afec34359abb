mod handlers;
mod routes;
mod server;
mod ws;

pub use routes::create_router;
pub use server::serve;
pub use ws::relay_ws_handler;
