mod diffs;
