//! Status outcomes and the response line they encode to

use std::fmt;

/// Result of handling one request, mapped 1:1 to an HTTP status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusOutcome {
    Ok,
    BadRequest,
    NotFound,
    InternalError,
}

impl StatusOutcome {
    pub fn code(self) -> u16 {
        match self {
            StatusOutcome::Ok => 200,
            StatusOutcome::BadRequest => 400,
            StatusOutcome::NotFound => 404,
            StatusOutcome::InternalError => 500,
        }
    }

    /// Standard HTTP reason phrase for the code
    pub fn reason(self) -> &'static str {
        match self {
            StatusOutcome::Ok => "OK",
            StatusOutcome::BadRequest => "Bad Request",
            StatusOutcome::NotFound => "Not Found",
            StatusOutcome::InternalError => "Internal Server Error",
        }
    }

    /// Encode as a complete, bodiless response
    pub fn to_response(self) -> String {
        format!("HTTP/1.1 {self}\r\nContent-Length: 0\r\n\r\n")
    }
}

impl fmt::Display for StatusOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ok_response_is_exact() {
        assert_eq!(
            StatusOutcome::Ok.to_response(),
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[rstest]
    #[case::bad_request(StatusOutcome::BadRequest, "HTTP/1.1 400 Bad Request\r\n")]
    #[case::not_found(StatusOutcome::NotFound, "HTTP/1.1 404 Not Found\r\n")]
    #[case::internal(StatusOutcome::InternalError, "HTTP/1.1 500 Internal Server Error\r\n")]
    fn status_lines(#[case] status: StatusOutcome, #[case] line: &str) {
        let response = status.to_response();
        assert!(response.starts_with(line), "{response:?}");
        assert!(response.ends_with("\r\nContent-Length: 0\r\n\r\n"));
    }
}
