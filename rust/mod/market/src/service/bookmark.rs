use tracing::debug;

use vhub_core::{new_id, now_rfc3339};

use crate::model::{Actor, SavedBookmark};
use crate::policy::Operation;
use crate::service::{MarketError, MarketService};

impl MarketService {
    /// Save an opportunity for later. Saving the same one twice returns
    /// the existing bookmark.
    pub fn save_bookmark(
        &self,
        actor: &Actor,
        opportunity_id: &str,
    ) -> Result<SavedBookmark, MarketError> {
        let user_id = actor.id().unwrap_or_default();
        self.authorize(actor, Operation::CreateBookmark { user_id })?;

        // Only what the student can see can be bookmarked.
        self.get_opportunity(actor, opportunity_id)?;

        let now = now_rfc3339();
        let id = new_id();
        let bookmark =
            self.with_retry("save_bookmark", |s| s.save_bookmark(&id, user_id, opportunity_id, &now))?;
        debug!(user_id, opportunity_id, "bookmark saved");
        Ok(bookmark)
    }

    pub fn remove_bookmark(&self, actor: &Actor, opportunity_id: &str) -> Result<(), MarketError> {
        let user_id = actor.id().unwrap_or_default();
        self.authorize(actor, Operation::DeleteBookmark { user_id })?;

        if !self.with_retry("remove_bookmark", |s| s.remove_bookmark(user_id, opportunity_id))? {
            return Err(MarketError::NotFound(format!("bookmark for {opportunity_id}")));
        }
        debug!(user_id, opportunity_id, "bookmark removed");
        Ok(())
    }

    pub fn list_bookmarks(&self, actor: &Actor) -> Result<Vec<SavedBookmark>, MarketError> {
        self.authorize(actor, Operation::ReadOwnActivity)?;
        let user_id = actor.id().ok_or(MarketError::AuthenticationRequired)?;
        self.with_retry("list_bookmarks", |s| s.bookmarks_for_user(user_id))
    }
}
