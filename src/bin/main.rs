use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{AvlSet, AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct Job {
    links: Links<Job>,
    deadline: u32,
}

impl Job {
    fn new(deadline: u32) -> Box<Job> {
        Box::new(Job {
            links: Links::new(),
            deadline,
        })
    }
}

unsafe impl Linked<Links<Job>> for Job {
    type Handle = Box<Job>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Job>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<Job>> for Job {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.deadline
    }
}

fn main() -> cordyceps_avl::Result<()> {
    let mut jobs: AvlTree<Job> = AvlTree::new();

    for deadline in [20, 5, 30, 10, 25] {
        jobs.insert(Job::new(deadline));
        jobs.check()?;
        println!("{:?}", jobs.iter().map(|job| job.deadline).collect::<Vec<_>>());
    }

    let third = jobs.select(3)?;
    println!("third deadline: {}", third.deadline);
    println!("jobs due before 21: {}", jobs.rank(&21));

    if let Some(mut cursor) = jobs.find(&10) {
        cursor.move_next();
        println!("after 10 comes {:?}", cursor.get().map(|job| job.deadline));
    }

    let soonest = jobs.pop_first().map(|job| job.deadline);
    println!("ran job due at {soonest:?}");

    let mut set: AvlSet<i32> = [5, 3, 8, 1, 4, 7, 9].into_iter().collect();
    let _ = set.delete(&5);
    println!("{}", set.preorder_with_nulls());

    let bytes = set.to_bytes();
    let decoded = AvlSet::from_bytes(&bytes)?;
    println!(
        "{} bytes, shape preserved: {}",
        bytes.len(),
        decoded.preorder_with_nulls() == set.preorder_with_nulls()
    );

    let (low, high, found) = decoded.split(&4);
    println!("split at 4 (found: {found}): {low:?} | {high:?}");

    Ok(())
}
