/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

pub mod component;
pub mod firmware_update;
pub mod migrations;
pub mod nvl_domain;
pub mod pmc;
pub mod rack;

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;

use tonic::Status;

///
/// Wraps a sqlx::Error and records location and query
///
#[derive(Debug)]
pub struct AnnotatedSqlxError {
    file: &'static str,
    line: u32,
    query: String,
    pub source: sqlx::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlx(#[from] AnnotatedSqlxError),
    #[error("{kind} not found: {id}")]
    NotFoundError {
        /// The type of the resource that was not found (e.g. Rack)
        kind: &'static str,
        /// The ID of the resource that was not found
        id: String,
    },
    #[error("{kind} already exists: {id}")]
    AlreadyFoundError {
        /// The type of the resource that already exists (e.g. PMC)
        kind: &'static str,
        /// The ID of the resource that already exists.
        id: String,
    },
    #[error("Internal error: {message}")]
    Internal { message: String },
    #[error("Argument is invalid: {0}")]
    InvalidArgument(String),
    #[error("Argument is missing in input: {0}")]
    MissingArgument(&'static str),
    #[error("{0}")]
    FailedPrecondition(String),
    #[error("Unable to parse string into IP Address: {0}")]
    AddressParseError(#[from] std::net::AddrParseError),
    #[error("Uuid type conversion error: {0}")]
    UuidConversionError(#[from] uuid::Error),
    #[error("The function is not implemented")]
    NotImplemented,
}

impl DatabaseError {
    /// Returns true if the database error wraps a sqlx::Error::RowNotFound,
    /// or if it's our own DatabaseError::NotFoundError
    pub fn is_not_found(&self) -> bool {
        match self {
            DatabaseError::Sqlx(e) => matches!(e.source, sqlx::Error::RowNotFound),
            DatabaseError::NotFoundError { .. } => true,
            _ => false,
        }
    }

    #[track_caller]
    pub fn new(op_name: &str, source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: op_name.to_string(),
            source,
        })
    }

    #[track_caller]
    pub fn acquire(source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: "acquire connection".into(),
            source,
        })
    }

    #[track_caller]
    pub fn query(query: &str, source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: query.to_string(),
            source,
        })
    }

    /// Creates a `Internal` error with the given error message
    pub fn internal(message: String) -> Self {
        DatabaseError::Internal { message }
    }

    /// Classifies a unique-constraint violation into `AlreadyFoundError`
    /// when the violated constraint is one the caller names, falling back
    /// to an annotated query error.
    #[track_caller]
    pub fn classify_unique(
        query: &str,
        source: sqlx::Error,
        constraints: &[(&str, &'static str)],
        id: &str,
    ) -> DatabaseError {
        if let sqlx::Error::Database(db_err) = &source {
            if let Some(violated) = db_err.constraint() {
                for (constraint, kind) in constraints {
                    if violated == *constraint {
                        return DatabaseError::AlreadyFoundError {
                            kind,
                            id: id.to_string(),
                        };
                    }
                }
            }
        }
        DatabaseError::query(query, source)
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl AnnotatedSqlxError {
    #[track_caller]
    pub fn new(op_name: &str, source: sqlx::Error) -> Self {
        let loc = Location::caller();
        AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: op_name.to_string(),
            source,
        }
    }
}

impl Display for AnnotatedSqlxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Database Error: {} file={} line={} query={}.",
            self.source, self.file, self.line, self.query,
        )
    }
}

impl Error for AnnotatedSqlxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

impl From<DatabaseError> for tonic::Status {
    fn from(from: DatabaseError) -> Self {
        // If env RUST_BACKTRACE is set extract handler and err location
        // If it's not set `Backtrace::capture()` is very cheap to call
        let b = Backtrace::capture();
        let printed = if b.status() == BacktraceStatus::Captured {
            let b_str = b.to_string();
            let f = b_str
                .lines()
                .skip(1)
                .skip_while(|l| !l.contains("anvil"))
                .take(2)
                .collect::<Vec<&str>>();
            if f.len() == 2 {
                let handler = f[0].trim();
                let location = f[1].trim().replace("at ", "");
                tracing::error!("{from} location={location} handler='{handler}'");
                true
            } else {
                false
            }
        } else {
            false
        };

        if !printed {
            match from {
                DatabaseError::NotImplemented => {}
                _ => tracing::error!("{from}"),
            }
        }

        match &from {
            DatabaseError::AddressParseError(e) => Status::invalid_argument(e.to_string()),
            error @ DatabaseError::AlreadyFoundError { .. } => {
                Status::already_exists(error.to_string())
            }
            error @ DatabaseError::FailedPrecondition(_) => {
                Status::failed_precondition(error.to_string())
            }
            error @ DatabaseError::Internal { .. } => Status::internal(error.to_string()),
            DatabaseError::InvalidArgument(msg) => Status::invalid_argument(msg),
            DatabaseError::MissingArgument(msg) => Status::invalid_argument(*msg),
            DatabaseError::NotFoundError { kind, id } => {
                Status::not_found(format!("{kind} not found: {id}"))
            }
            DatabaseError::NotImplemented => Status::unimplemented("not implemented"),
            error @ DatabaseError::UuidConversionError(_) => {
                Status::invalid_argument(error.to_string())
            }
            other => Status::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_new() {
        const OP_NAME: &str = "something people want to say";
        let DatabaseError::Sqlx(err) =
            DatabaseError::new(OP_NAME, sqlx::Error::protocol("some error"))
        else {
            unreachable!()
        };
        assert_eq!(err.line, line!() - 4);
        assert_eq!(err.file, file!());
        assert!(format!("{err}").contains(OP_NAME))
    }

    #[test]
    fn test_database_error_query() {
        const DB_QUERY: &str = "SELECT * from some_table;";
        let DatabaseError::Sqlx(err) =
            DatabaseError::query(DB_QUERY, sqlx::Error::protocol("some error"))
        else {
            unreachable!()
        };
        assert_eq!(err.line, line!() - 4);
        assert_eq!(err.file, file!());
        assert!(format!("{err}").contains(DB_QUERY));
    }

    #[test]
    fn test_not_found_maps_to_not_found_status() {
        let status = Status::from(DatabaseError::NotFoundError {
            kind: "Rack",
            id: "abc".to_string(),
        });
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert!(status.message().contains("Rack not found: abc"));
    }

    #[test]
    fn test_already_found_maps_to_already_exists_status() {
        let status = Status::from(DatabaseError::AlreadyFoundError {
            kind: "PMC",
            id: "00:11:22:33:44:55".to_string(),
        });
        assert_eq!(status.code(), tonic::Code::AlreadyExists);
    }
}
