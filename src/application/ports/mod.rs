pub mod stripe_api;
