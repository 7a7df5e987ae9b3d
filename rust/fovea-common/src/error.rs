use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn schema_not_registered(name: impl Into<String>) -> Error {
        Error(ErrorKind::SchemaNotRegistered { name: name.into() }.into())
    }

    pub fn schema_missing_item() -> Error {
        Error(ErrorKind::SchemaMissingItem.into())
    }

    pub fn invalid_collection(field: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidCollection {
                field: field.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn table_not_found(table: impl Into<String>) -> Error {
        Error(
            ErrorKind::TableNotFound {
                table: table.into(),
            }
            .into(),
        )
    }

    pub fn id_not_found(id: impl Into<String>) -> Error {
        Error(ErrorKind::IdNotFound { id: id.into() }.into())
    }

    pub fn id_contains_whitespace(table: impl Into<String>, id: impl Into<String>) -> Error {
        Error(
            ErrorKind::IdContainsWhitespace {
                table: table.into(),
                id: id.into(),
            }
            .into(),
        )
    }

    pub fn media_url_unresolved(url: impl Into<String>, reason: impl Into<String>) -> Error {
        Error(
            ErrorKind::MediaUrlUnresolved {
                url: url.into(),
                reason: reason.into(),
            }
            .into(),
        )
    }

    pub fn invalid_pagination(start: usize, stop: usize) -> Error {
        Error(ErrorKind::InvalidPagination { start, stop }.into())
    }

    pub fn registry_frozen(registry: impl Into<String>, name: impl Into<String>) -> Error {
        Error(
            ErrorKind::RegistryFrozen {
                registry: registry.into(),
                name: name.into(),
            }
            .into(),
        )
    }

    pub fn duplicate_schema(name: impl Into<String>) -> Error {
        Error(ErrorKind::DuplicateSchema { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn arrow<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Arrow {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    pub fn backend<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Backend {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("schema or type '{name}' is not registered")]
    SchemaNotRegistered { name: String },

    #[error("dataset schema does not contain an item table")]
    SchemaMissingItem,

    #[error("invalid collection annotation for field '{field}': {message}")]
    InvalidCollection { field: String, message: String },

    #[error("table '{table}' is not part of the dataset schema")]
    TableNotFound { table: String },

    #[error("no rows found for id '{id}' in any selected table")]
    IdNotFound { id: String },

    #[error("id '{id}' written to table '{table}' contains whitespace")]
    IdContainsWhitespace { table: String, id: String },

    #[error("media url '{url}' cannot be resolved: {reason}")]
    MediaUrlUnresolved { url: String, reason: String },

    #[error("invalid pagination window: start {start} >= stop {stop}")]
    InvalidPagination { start: usize, stop: usize },

    #[error("registry '{registry}' is frozen; cannot register '{name}'")]
    RegistryFrozen { registry: String, name: String },

    #[error("'{name}' is already registered under the same canonical name")]
    DuplicateSchema { name: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("Arrow error: {context}")]
    Arrow {
        context: String,
        source: StdErrorBoxed,
    },

    #[error("storage backend error: {context}")]
    Backend {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
