/// Router Module Index
///
/// Groups the routes by the role the access policy demands of them. The grouping is
/// organisational: enforcement happens once, in `access::enforce`, against the
/// policy table.

/// Routes open to everyone (anonymous included): the JSON API, the catalog pages,
/// registration, login/logout and the denial page.
pub mod public;

/// Routes under `/user/**`: USER or ADMIN.
pub mod authenticated;

/// Routes under `/admin/**`: ADMIN only.
pub mod admin;
