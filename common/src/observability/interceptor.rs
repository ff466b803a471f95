#[cfg(feature = "grpc")]
use tonic::Request;

#[cfg(feature = "grpc")]
use tracing::info;

/// Log every metadata key/value on an incoming gRPC request, for debugging
/// trace propagation across the client/service boundary.
#[cfg(feature = "grpc")]
pub fn log_grpc_metadata<T>(request: &Request<T>) {
    use tonic::metadata::KeyAndValueRef;

    let metadata = request.metadata();
    info!(metadata_count = metadata.len(), "incoming gRPC request metadata");

    for key_value in metadata.iter() {
        match key_value {
            KeyAndValueRef::Ascii(key, value) => {
                if let Ok(value_str) = value.to_str() {
                    info!(key = %key, value = %value_str, "metadata entry (ascii)");
                }
            }
            KeyAndValueRef::Binary(key, _value) => {
                info!(key = %key, "metadata entry (binary)");
            }
        }
    }
}
