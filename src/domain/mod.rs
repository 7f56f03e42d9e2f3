// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Decision logic of the service. Storage and broker adapters live outside
// this layer and are reached only through the traits declared here.
//
// ============================================================================

pub mod registration;
