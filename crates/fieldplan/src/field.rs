//! Field identity: tokens, typed field handles and model references.
//!
//! A model reference (`UserRef` for a `User` model) holds one [`Field`] per
//! column. Each handle carries a process-unique [`FieldToken`], so plans
//! resolve a handle back to its column by identity and never by value.
//!
//! ```ignore
//! let user = User::fields();
//! let admins = db.query(&user).where_().equal(user.role, "admin").select().await?;
//! ```

use crate::meta::Model;
use crate::plan::{RawQuery, SubQuery};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one struct field occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldToken(u64);

impl FieldToken {
    /// Issue a token that no other handle in this process carries.
    pub fn fresh() -> Self {
        FieldToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed handle to a model field.
///
/// `T` is the column's value type with any `Option` removed; it restricts
/// which literals a filter or assignment accepts for this field.
pub struct Field<T> {
    token: FieldToken,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    pub fn from_token(token: FieldToken) -> Self {
        Self {
            token,
            _ty: PhantomData,
        }
    }

    pub fn token(self) -> FieldToken {
        self.token
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl<T> Eq for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.token).finish()
    }
}

/// Anything that identifies a mapped column, whatever its value type.
pub trait FieldRef {
    fn field_token(&self) -> FieldToken;
}

impl<T> FieldRef for Field<T> {
    fn field_token(&self) -> FieldToken {
        self.token
    }
}

impl<M: Model> FieldRef for Rel<M> {
    fn field_token(&self) -> FieldToken {
        self.token
    }
}

/// Something a plan can be built from or joined against.
///
/// Implemented by generated model references, by [`Rel`] handles reached
/// through a parent reference, and by select-capable plans (sub-queries).
pub trait Target {
    type Model: Model;

    /// Token identifying the reference itself.
    ///
    /// For a relation this equals the token of the parent's relation field,
    /// which is how the mapper finds the join path.
    fn target_token(&self) -> FieldToken;

    /// One token per column, in table definition order.
    fn column_tokens(&self) -> Vec<FieldToken>;

    fn as_sub_query(&self) -> Option<&dyn SubQuery> {
        None
    }

    /// The hand-written SELECT standing in for the table, if any.
    fn as_raw_query(&self) -> Option<&RawQuery> {
        None
    }
}

/// Issues tokens while a model reference is being built.
///
/// Tokens are allocated per column name on first request, so a column that
/// is asked for twice (once as a field, once as a relation link) shares one
/// token. Overrides pre-assign tokens to columns that must share identity
/// with a column of the parent reference.
#[derive(Debug)]
pub struct RefBuilder {
    own: FieldToken,
    issued: Vec<(&'static str, FieldToken)>,
}

impl RefBuilder {
    pub fn new() -> Self {
        Self {
            own: FieldToken::fresh(),
            issued: Vec::new(),
        }
    }

    pub(crate) fn scoped(own: FieldToken, overrides: &[(&'static str, FieldToken)]) -> Self {
        Self {
            own,
            issued: overrides.to_vec(),
        }
    }

    /// Token of the reference being built.
    pub fn own_token(&self) -> FieldToken {
        self.own
    }

    pub fn token_for(&mut self, column: &'static str) -> FieldToken {
        if let Some((_, token)) = self.issued.iter().find(|(name, _)| *name == column) {
            return *token;
        }
        let token = FieldToken::fresh();
        self.issued.push((column, token));
        token
    }

    pub fn field<T>(&mut self, column: &'static str) -> Field<T> {
        Field::from_token(self.token_for(column))
    }

    /// Build a relation handle for `column`.
    ///
    /// `links` pairs a column of the related table with a column of this
    /// table; the related column reuses the local column's token. A
    /// belongs-to relation links the target key to the local foreign key, a
    /// has-many relation links the remote foreign key to the local key.
    pub fn relation<M: Model>(
        &mut self,
        column: &'static str,
        links: &[(&'static str, &'static str)],
    ) -> Rel<M> {
        let token = self.token_for(column);
        let overrides = links
            .iter()
            .map(|(remote, local)| (*remote, self.token_for(local)))
            .collect();
        Rel {
            token,
            overrides,
            inner: OnceLock::new(),
        }
    }
}

impl Default for RefBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a related model reached through a parent reference.
///
/// The related reference is built on first dereference and boxed, which
/// keeps mutually related models from recursing at construction.
pub struct Rel<M: Model> {
    token: FieldToken,
    overrides: Vec<(&'static str, FieldToken)>,
    inner: OnceLock<Box<M::Ref>>,
}

impl<M: Model> Rel<M> {
    pub fn token(&self) -> FieldToken {
        self.token
    }
}

impl<M: Model> Deref for Rel<M> {
    type Target = M::Ref;

    fn deref(&self) -> &M::Ref {
        self.inner.get_or_init(|| {
            let mut builder = RefBuilder::scoped(self.token, &self.overrides);
            Box::new(M::build_ref(&mut builder))
        })
    }
}

impl<M: Model> Target for Rel<M> {
    type Model = M;

    fn target_token(&self) -> FieldToken {
        self.token
    }

    fn column_tokens(&self) -> Vec<FieldToken> {
        (**self).column_tokens()
    }
}

impl<M: Model> fmt::Debug for Rel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rel")
            .field("model", &M::table_def().name)
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Player, Team};

    #[test]
    fn tokens_are_unique_per_reference() {
        let a = Player::fields();
        let b = Player::fields();
        assert_ne!(a.id, b.id);
        assert_ne!(a.target_token(), b.target_token());
        assert_eq!(a.id, a.id);
    }

    #[test]
    fn builder_reuses_tokens_per_column() {
        let mut builder = RefBuilder::new();
        let first = builder.token_for("id");
        let second = builder.token_for("id");
        assert_eq!(first, second);
        assert_ne!(first, builder.token_for("name"));
    }

    #[test]
    fn belongs_to_shares_the_foreign_key_token() {
        let player = Player::fields();
        assert_eq!(player.team.id, player.team_id);
        assert_eq!(player.team.target_token(), player.team.token());
        assert_eq!(player.team.column_tokens().len(), Team::table_def().columns.len());
    }

    #[test]
    fn has_many_shares_the_parent_key_token() {
        let team = Team::fields();
        assert_eq!(team.players.team_id, team.id);
        assert_ne!(team.players.id, team.id);
    }

    #[test]
    fn relation_is_built_once() {
        let player = Player::fields();
        let first = player.team.name;
        assert_eq!(first, player.team.name);
    }
}
