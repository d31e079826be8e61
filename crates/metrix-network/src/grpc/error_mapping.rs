use metrix_core::error::CoreError;
use tonic::{Code, Status};

/// 서버가 돌려준 gRPC Status를 코어 에러로 변환
pub fn map_grpc_status_error(operation: &str, status: Status) -> CoreError {
    let code = status.code();
    let message = status.message().to_string();

    match code {
        Code::PermissionDenied => CoreError::Forbidden(format!("{operation}: {message}")),
        Code::NotFound => CoreError::NotFound {
            resource_type: operation.to_string(),
            id: message,
        },
        Code::Unavailable if message.contains("connect") => {
            CoreError::Network(format!("{operation}: {message}"))
        }
        _ => CoreError::Rpc(format!("{operation}: {message} ({code})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_permission_denied_to_forbidden() {
        let err = map_grpc_status_error("grpc updates", Status::permission_denied("subnet"));
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn maps_invalid_argument_to_rpc_error() {
        let err = map_grpc_status_error("grpc updates", Status::invalid_argument("missing id"));
        match err {
            CoreError::Rpc(message) => {
                assert!(message.contains("missing id"));
                assert!(message.contains("grpc updates"));
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn maps_not_found() {
        let err = map_grpc_status_error("grpc updates", Status::not_found("hits"));
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
