//! Static descriptors for every content type served by the CMS.
//!
//! One generic CRUD component is driven by these descriptors: the table it
//! writes to, the fields a request may carry, which of them are required, and
//! which mutations the route layer exposes.

/// A single declared field of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Name used in JSON bodies and responses.
    pub key: &'static str,
    /// Column name in the store.
    pub column: &'static str,
    /// Human-readable name used in validation messages.
    pub label: &'static str,
    pub required: bool,
}

impl FieldRule {
    const fn required(key: &'static str, column: &'static str, label: &'static str) -> Self {
        Self {
            key,
            column,
            label,
            required: true,
        }
    }

    const fn optional(key: &'static str, column: &'static str, label: &'static str) -> Self {
        Self {
            key,
            column,
            label,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Fixed set of text columns.
    Fields(&'static [FieldRule]),
    /// Any non-empty JSON object, stored whole in a `payload` column.
    Document,
}

/// Mutations beyond create that a resource exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ops {
    pub update: bool,
    pub delete: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Resource {
    pub name: &'static str,
    /// Route path, e.g. `/api/newslists`.
    pub path: &'static str,
    pub table: &'static str,
    /// Singular label, e.g. "Newslist item".
    pub label: &'static str,
    /// Plural label, e.g. "Newslist items".
    pub plural: &'static str,
    pub schema: Schema,
    pub ops: Ops,
}

/// JSON keys owned by the store; never written from a request body.
pub const SYSTEM_KEYS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Column holding the body of [`Schema::Document`] resources.
pub const PAYLOAD_COLUMN: &str = "payload";

/// Fields shared by news, newslist, edunews and gallery.
pub const ARTICLE_FIELDS: &[FieldRule] = &[
    FieldRule::required("title", "title", "Title"),
    FieldRule::required("imageUrl", "image_url", "Image URL"),
    FieldRule::optional("description", "description", "Description"),
];

pub const CONTACT_FIELDS: &[FieldRule] = &[
    FieldRule::required("email", "email", "Email"),
    FieldRule::optional("name", "name", "Name"),
    FieldRule::optional("message", "message", "Message"),
];

const READ_ONLY: Ops = Ops {
    update: false,
    delete: false,
};

const DELETABLE: Ops = Ops {
    update: false,
    delete: true,
};

pub static CONTACTS: Resource = Resource {
    name: "contacts",
    path: "/api/contacts",
    table: "contact",
    label: "Contact",
    plural: "Contacts",
    schema: Schema::Fields(CONTACT_FIELDS),
    ops: READ_ONLY,
};

pub static NEWS: Resource = Resource {
    name: "news",
    path: "/api/news",
    table: "news",
    label: "News item",
    plural: "News items",
    schema: Schema::Fields(ARTICLE_FIELDS),
    ops: DELETABLE,
};

pub static NEWSLIST: Resource = Resource {
    name: "newslist",
    path: "/api/newslists",
    table: "newslist",
    label: "Newslist item",
    plural: "Newslist items",
    schema: Schema::Fields(ARTICLE_FIELDS),
    ops: Ops {
        update: true,
        delete: true,
    },
};

pub static EDUNEWS: Resource = Resource {
    name: "edunews",
    path: "/api/edunews",
    table: "edunews",
    label: "Education news item",
    plural: "Education news items",
    schema: Schema::Fields(ARTICLE_FIELDS),
    ops: DELETABLE,
};

pub static GALLERY: Resource = Resource {
    name: "gallery",
    path: "/api/galleries",
    table: "gallery",
    label: "Gallery item",
    plural: "Gallery items",
    schema: Schema::Fields(ARTICLE_FIELDS),
    ops: DELETABLE,
};

pub static POST: Resource = Resource {
    name: "post",
    path: "/api/posts",
    table: "post",
    label: "Post",
    plural: "Posts",
    schema: Schema::Document,
    ops: Ops {
        update: true,
        delete: true,
    },
};

/// Every store-backed resource, in route registration order.
pub static ALL: [&Resource; 6] = [&CONTACTS, &NEWS, &NEWSLIST, &EDUNEWS, &GALLERY, &POST];

/// Look a resource up by its `name`.
pub fn by_name(name: &str) -> Option<&'static Resource> {
    ALL.iter().copied().find(|r| r.name == name)
}

impl Resource {
    pub fn fields(&self) -> &'static [FieldRule] {
        match self.schema {
            Schema::Fields(fields) => fields,
            Schema::Document => &[],
        }
    }

    /// Data columns of the table, excluding `id` and timestamps.
    pub fn data_columns(&self) -> Vec<&'static str> {
        match self.schema {
            Schema::Fields(fields) => fields.iter().map(|f| f.column).collect(),
            Schema::Document => vec![PAYLOAD_COLUMN],
        }
    }

    /// Column list used by every SELECT/RETURNING against this table.
    pub fn select_list(&self) -> String {
        let mut cols = vec!["id", "created_at", "updated_at"];
        cols.extend(self.data_columns());
        cols.join(", ")
    }
}
