/// Cover image rules for project galleries
///
/// A gallery with at least one image has exactly one cover. Every write path
/// (create, add, remove, explicit cover choice) ends by asking
/// [`plan_cover`] which image must carry the flag and applying the answer in
/// the same transaction.
///
/// Gallery order is the upload order (`position`). For display, the cover
/// comes first and the remaining images form the carousel.

use uuid::Uuid;

/// Errors raised while editing a gallery
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// A new project needs at least one usable image
    #[error("At least one valid image (JPEG, PNG or WebP) is required")]
    NoValidImage,

    /// Referenced image does not belong to the project
    #[error("Image {0} does not belong to this project")]
    ForeignImage(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Anything that can sit in a gallery
pub trait GalleryItem {
    fn id(&self) -> Uuid;
    fn is_cover(&self) -> bool;
}

/// Chooses the image that must be the cover
///
/// `items` is the gallery in upload order. The rules, in priority order:
///
/// 1. a `requested` id that is part of the gallery
/// 2. the first image already flagged as cover
/// 3. the first image
///
/// Returns `None` only for an empty gallery.
///
/// # Example
///
/// ```
/// use atelier_shared::gallery::{plan_cover, GalleryItem};
/// use uuid::Uuid;
///
/// struct Img(Uuid, bool);
/// impl GalleryItem for Img {
///     fn id(&self) -> Uuid { self.0 }
///     fn is_cover(&self) -> bool { self.1 }
/// }
///
/// let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
/// let gallery = vec![Img(a, false), Img(b, false)];
/// assert_eq!(plan_cover(&gallery, None), Some(a));
/// assert_eq!(plan_cover(&gallery, Some(b)), Some(b));
/// ```
pub fn plan_cover<T: GalleryItem>(items: &[T], requested: Option<Uuid>) -> Option<Uuid> {
    if let Some(requested) = requested {
        if items.iter().any(|item| item.id() == requested) {
            return Some(requested);
        }
    }

    items
        .iter()
        .find(|item| item.is_cover())
        .or_else(|| items.first())
        .map(GalleryItem::id)
}

/// The cover to display: the flagged image, falling back to the first one
pub fn cover_of<T: GalleryItem>(items: &[T]) -> Option<&T> {
    items.iter().find(|item| item.is_cover()).or_else(|| items.first())
}

/// Images shown after the cover
pub fn carousel<T: GalleryItem>(items: &[T]) -> Vec<&T> {
    let cover = cover_of(items).map(GalleryItem::id);
    items.iter().filter(|item| Some(item.id()) != cover).collect()
}

/// Whether a gallery satisfies the single-cover rule
pub fn has_single_cover<T: GalleryItem>(items: &[T]) -> bool {
    let covers = items.iter().filter(|item| item.is_cover()).count();
    if items.is_empty() {
        covers == 0
    } else {
        covers == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Img {
        id: Uuid,
        cover: bool,
    }

    impl GalleryItem for Img {
        fn id(&self) -> Uuid {
            self.id
        }
        fn is_cover(&self) -> bool {
            self.cover
        }
    }

    fn gallery(covers: &[bool]) -> Vec<Img> {
        covers
            .iter()
            .map(|&cover| Img {
                id: Uuid::new_v4(),
                cover,
            })
            .collect()
    }

    /// Applies a plan the way the SQL update does
    fn apply(items: &mut [Img], cover: Option<Uuid>) {
        for item in items.iter_mut() {
            item.cover = Some(item.id) == cover;
        }
    }

    #[test]
    fn test_empty_gallery_has_no_cover() {
        let items: Vec<Img> = Vec::new();
        assert_eq!(plan_cover(&items, None), None);
        assert_eq!(plan_cover(&items, Some(Uuid::new_v4())), None);
        assert!(has_single_cover(&items));
    }

    #[test]
    fn test_first_image_becomes_cover() {
        let items = gallery(&[false, false, false]);
        assert_eq!(plan_cover(&items, None), Some(items[0].id));
    }

    #[test]
    fn test_existing_cover_is_kept() {
        let items = gallery(&[false, true, false]);
        assert_eq!(plan_cover(&items, None), Some(items[1].id));
    }

    #[test]
    fn test_requested_cover_wins() {
        let items = gallery(&[true, false, false]);
        assert_eq!(plan_cover(&items, Some(items[2].id)), Some(items[2].id));
    }

    #[test]
    fn test_foreign_request_is_ignored() {
        let items = gallery(&[false, true]);
        assert_eq!(plan_cover(&items, Some(Uuid::new_v4())), Some(items[1].id));
    }

    #[test]
    fn test_duplicate_covers_collapse_to_one() {
        let mut items = gallery(&[true, true, false]);
        let plan = plan_cover(&items, None);
        apply(&mut items, plan);

        assert!(has_single_cover(&items));
        assert!(items[0].cover);
    }

    #[test]
    fn test_removing_cover_promotes_next_image() {
        let mut items = gallery(&[true, false, false]);
        let expected = items[1].id;

        items.remove(0);
        let plan = plan_cover(&items, None);
        apply(&mut items, plan);

        assert_eq!(plan, Some(expected));
        assert!(has_single_cover(&items));
    }

    #[test]
    fn test_invariant_holds_across_add_and_remove_sequence() {
        let mut items: Vec<Img> = Vec::new();

        for step in 0..12 {
            if step % 3 == 2 && !items.is_empty() {
                let idx = step % items.len();
                items.remove(idx);
            } else {
                items.push(Img {
                    id: Uuid::new_v4(),
                    cover: false,
                });
            }

            let plan = plan_cover(&items, None);
            apply(&mut items, plan);
            assert!(has_single_cover(&items), "step {}", step);
        }
    }

    #[test]
    fn test_cover_of_and_carousel() {
        let items = gallery(&[false, true, false]);

        assert_eq!(cover_of(&items).map(|i| i.id), Some(items[1].id));

        let rest: Vec<Uuid> = carousel(&items).iter().map(|i| i.id).collect();
        assert_eq!(rest, vec![items[0].id, items[2].id]);
    }

    #[test]
    fn test_cover_of_falls_back_to_first() {
        let items = gallery(&[false, false]);

        assert_eq!(cover_of(&items).map(|i| i.id), Some(items[0].id));
        assert_eq!(carousel(&items).len(), 1);
    }
}
