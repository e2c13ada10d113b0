//! Library root for the `access_arbiter` crate

// Core error handling
pub mod errors;

// Request vocabulary & inputs
pub mod input_validator;
pub mod profile;
pub mod vocabulary;

// Attribute inference
pub mod attribute_inferencer;
pub mod text_classifier;

// Features & policy
pub mod feature_builder;
pub mod policy_gate;

// Frozen models
pub mod classifier;
pub mod isolation_forest;
pub mod model_adapters;
pub mod model_bundle;
pub mod onnx_classifier;
pub mod preprocessor;

// Decision pipeline
pub mod decision_composer;

// Configuration & CLI
pub mod cli;
pub mod config_loader;

// Web server interface
pub mod api_errors;
pub mod app_state;
pub mod web;

// Logging
pub mod log_sink;

pub use decision_composer::{AnomalyPolicy, DecisionComposer, DecisionReport, DecisionSettings};
pub use errors::{ArbiterError, ArbiterResult, Stage};
pub use profile::{AccessRequest, DecisionRequest, RequesterProfile};
