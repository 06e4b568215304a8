//! gRPC side of the bridge.
//!
//! Serves the Thanos `Query`, `Store` and `info.Info` APIs on top of a
//! [`querybridge_backend::Backend`].

mod convert;
mod info;
mod query;
mod server;
mod store;

#[allow(unused)]
pub mod proto {
    pub mod thanos {
        include!(concat!(env!("OUT_DIR"), "/thanos.rs"));

        pub mod info {
            include!(concat!(env!("OUT_DIR"), "/thanos.info.rs"));
        }
    }

    pub mod prometheus_copy {
        include!(concat!(env!("OUT_DIR"), "/prometheus_copy.rs"));
    }
}

pub use info::InfoService;
pub use query::QueryService;
pub use server::Server;
pub use store::StoreService;

#[cfg(test)]
pub(crate) mod testing;
